use serde::Serialize;

/// How long a pull request has been sitting without activity, relative to
/// what it is waiting for.
///
/// Mergeable PRs climb towards `YSYL` ("you snooze, you lose"), PRs that still
/// need work climb towards `Abandoned`. The two ladders only share the first
/// two rungs.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Staleness {
    Fresh,
    PayAttention,
    NearlyYSYL,
    YSYL,
    NearlyAbandoned,
    Abandoned,
}

impl Staleness {
    pub fn classify(days: u32, mergeable: bool) -> Staleness {
        if mergeable {
            match days {
                0..=2 => Staleness::Fresh,
                3..=4 => Staleness::PayAttention,
                5..=8 => Staleness::NearlyYSYL,
                _ => Staleness::YSYL,
            }
        } else {
            match days {
                0..=6 => Staleness::Fresh,
                7..=22 => Staleness::PayAttention,
                23..=30 => Staleness::NearlyAbandoned,
                _ => Staleness::Abandoned,
            }
        }
    }
}
