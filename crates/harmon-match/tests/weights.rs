use harmon_match::WeightUpdater;
use harmon_model::{Candidate, MatcherEntry, OperationKind};
use proptest::prelude::{any, prop, proptest};

#[test]
fn accept_at_rank_zero_adds_alpha_times_score_before_renormalization() {
    // One matcher, one candidate: the renormalized weight stays 1.0, so
    // verify the raw delta through a two-matcher setup where only one
    // matcher proposed the pair.
    let entries = vec![
        MatcherEntry::new("proposer", 0.5),
        MatcherEntry::new("bystander", 0.5),
    ];
    let candidates = vec![Candidate::new("Gender", "gender", 0.8, "proposer")];
    let alpha = 0.1;
    let beta = 0.25;

    let mut updater = WeightUpdater::new(entries.clone(), &candidates, alpha, beta);
    updater.update(OperationKind::Accept, "Gender", "gender");
    // Raw weights before renormalization: 0.5 + alpha*0.8 vs 0.5.
    let expected = (0.5 + alpha * 0.8) / (1.0 + alpha * 0.8);
    assert!((updater.weight("proposer").unwrap() - expected).abs() < 1e-9);

    let mut updater = WeightUpdater::new(entries, &candidates, alpha, beta);
    updater.update(OperationKind::Reject, "Gender", "gender");
    let expected = (0.5 - beta * 0.8) / (1.0 - beta * 0.8);
    assert!((updater.weight("proposer").unwrap() - expected).abs() < 1e-9);
}

proptest! {
    #[test]
    fn weights_always_sum_to_one_after_updates(
        initial in prop::collection::vec(0.01f64..10.0, 1..6),
        accepts in prop::collection::vec(any::<bool>(), 0..12),
    ) {
        let entries: Vec<MatcherEntry> = initial
            .iter()
            .enumerate()
            .map(|(i, w)| MatcherEntry::new(format!("m{i}"), *w))
            .collect();
        let candidates: Vec<Candidate> = entries
            .iter()
            .map(|e| Candidate::new("src", "tgt", 0.5, e.name.clone()))
            .collect();
        let mut updater = WeightUpdater::new(entries, &candidates, 0.1, 0.1);
        updater.normalize(false);
        for accept in accepts {
            let kind = if accept { OperationKind::Accept } else { OperationKind::Reject };
            updater.update(kind, "src", "tgt");
        }
        let total = updater.total_weight();
        assert!((total - 1.0).abs() < 1e-6, "total was {total}");
    }
}
