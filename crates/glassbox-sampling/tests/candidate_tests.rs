use glassbox_sampling::{softmax, top_candidates};

#[test]
fn candidates_sorted_by_descending_probability() {
    let probs = softmax(&[0.1, 3.0, 0.5, 2.0, 1.0, 0.2]);
    let top = top_candidates(&probs, 5);

    assert_eq!(top.len(), 5);
    for pair in top.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
    assert_eq!(top[0].0, 1);
    assert_eq!(top[1].0, 3);
}

#[test]
fn ties_keep_vocabulary_order() {
    // Three-way tie: indices must come back in ascending order.
    let probs = vec![0.1, 0.3, 0.3, 0.3];
    let top = top_candidates(&probs, 3);
    assert_eq!(top[0].0, 1);
    assert_eq!(top[1].0, 2);
    assert_eq!(top[2].0, 3);
}

#[test]
fn exactly_n_when_vocab_large_enough() {
    let probs = vec![0.2; 50];
    assert_eq!(top_candidates(&probs, 5).len(), 5);
}

#[test]
fn short_distribution_returns_all_entries() {
    let probs = vec![0.7, 0.3];
    let top = top_candidates(&probs, 5);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, 0);
}

#[test]
fn candidate_probabilities_match_input() {
    let probs = softmax(&[2.0, 1.0, 0.0]);
    let top = top_candidates(&probs, 2);
    assert!((top[0].1 - probs[0]).abs() < 1e-6);
    assert!((top[1].1 - probs[1]).abs() < 1e-6);
}
