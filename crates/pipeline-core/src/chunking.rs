//! Oversized-result policy: collapsing individually oversize hints and
//! partitioning a terminal ResultMessage's hints across multiple emissions
//! so each fits under the bus's max message size.

use crate::model::{HintMessage, HintResult, ResultMessage};

fn serialized_len<T: serde::Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(usize::MAX)
}

/// Collapses any hint whose own `messages` array alone exceeds `max_size`
/// into the single synthetic "too many errors" message. Applied before
/// measuring the whole message (the proactive path, as opposed to the
/// reactive 413-retry a caller performs on a rejected send).
fn collapse_oversize_hints(hints: &mut [HintResult], max_size: usize) {
    for h in hints.iter_mut() {
        if serialized_len(&h.messages) > max_size {
            h.messages = vec![HintMessage::too_many_errors(&h.name)];
        }
    }
}

/// Greedy first-fit partition of `hints` into groups, each of which (once
/// embedded back into a ResultMessage with `template`) serializes to at
/// most `max_size` bytes. A hint that cannot fit into any existing group
/// starts a new one.
fn partition_hints(hints: Vec<HintResult>, fits: impl Fn(&[HintResult]) -> bool) -> Vec<Vec<HintResult>> {
    let mut groups: Vec<Vec<HintResult>> = Vec::new();
    for hint in hints {
        let mut placed = false;
        for group in groups.iter_mut() {
            group.push(hint.clone());
            if fits(group) {
                placed = true;
                break;
            }
            group.pop();
        }
        if !placed {
            groups.push(vec![hint]);
        }
    }
    groups
}

/// Packages a terminal `ResultMessage` (`Finished` or `Errored`) into one or
/// more messages that each fit under `max_size` bytes. Panics if called on
/// a `Started` message, which is never subject to chunking.
pub fn package_terminal(msg: ResultMessage, max_size: usize) -> Vec<ResultMessage> {
    assert!(msg.is_terminal(), "only terminal messages are chunked");

    let mut msg = msg;
    collapse_oversize_hints(&mut msg.common_mut().hints, max_size);

    if serialized_len(&msg) <= max_size {
        return vec![msg];
    }

    let hints = std::mem::take(&mut msg.common_mut().hints);
    let template = msg;
    let fits = |group: &[HintResult]| -> bool {
        let mut candidate = template.clone();
        candidate.common_mut().hints = group.to_vec();
        serialized_len(&candidate) <= max_size
    };
    let groups = partition_hints(hints, fits);

    groups
        .into_iter()
        .map(|group| {
            let mut m = template.clone();
            m.common_mut().hints = group;
            m
        })
        .collect()
}
