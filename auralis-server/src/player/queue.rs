/// Ordered playback queue plus shuffle/repeat selection. Lives inside the
/// player actor's single lock — there is no independent queue lock, since
/// every queue mutation that changes the predicted next track must
/// invalidate the gapless prebuffer atomically with the mutation itself.
use crate::models::player_state::RepeatMode;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    pub tracks: Vec<u32>,
    pub current_index: Option<usize>,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    /// A fixed permutation of queue indices, regenerated whenever shuffle is
    /// (re)enabled or the queue contents change, so consecutive `next` calls
    /// within one pass don't repeat or skip a track.
    shuffle_order: Vec<usize>,
    shuffle_position: usize,
}

/// Returned by mutating operations so the caller (the player actor) knows
/// whether to invalidate the gapless prebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEffect {
    pub predicted_next_changed: bool,
}

impl Queue {
    pub fn enqueue(&mut self, track_id: u32) -> MutationEffect {
        let predicted_before = self.predicted_next_index();
        self.tracks.push(track_id);
        self.regenerate_shuffle_order();
        MutationEffect {
            predicted_next_changed: predicted_before != self.predicted_next_index(),
        }
    }

    pub fn remove(&mut self, track_id: u32) -> (bool, MutationEffect) {
        let predicted_before = self.predicted_next_index();
        let Some(pos) = self.tracks.iter().position(|&t| t == track_id) else {
            // Idempotent: a second `remove` of an already-removed id is a
            // no-op returning `false`, never an error.
            return (false, MutationEffect { predicted_next_changed: false });
        };
        self.tracks.remove(pos);
        if let Some(current) = self.current_index {
            if pos < current {
                self.current_index = Some(current - 1);
            } else if pos == current {
                self.current_index = None;
            }
        }
        self.regenerate_shuffle_order();
        (
            true,
            MutationEffect {
                predicted_next_changed: predicted_before != self.predicted_next_index(),
            },
        )
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> MutationEffect {
        let predicted_before = self.predicted_next_index();
        if from < self.tracks.len() && to < self.tracks.len() && from != to {
            let item = self.tracks.remove(from);
            self.tracks.insert(to, item);
        }
        MutationEffect {
            predicted_next_changed: predicted_before != self.predicted_next_index(),
        }
    }

    pub fn set_shuffle(&mut self, enabled: bool) -> MutationEffect {
        if self.shuffle == enabled {
            // No-op: toggling to the already-current value must not
            // re-invalidate anything.
            return MutationEffect { predicted_next_changed: false };
        }
        let predicted_before = self.predicted_next_index();
        self.shuffle = enabled;
        if enabled {
            self.regenerate_shuffle_order();
        }
        MutationEffect {
            predicted_next_changed: predicted_before != self.predicted_next_index(),
        }
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) -> MutationEffect {
        if self.repeat_mode == mode {
            return MutationEffect { predicted_next_changed: false };
        }
        let predicted_before = self.predicted_next_index();
        self.repeat_mode = mode;
        MutationEffect {
            predicted_next_changed: predicted_before != self.predicted_next_index(),
        }
    }

    /// The track id that will play after `current_index`, per shuffle/repeat
    /// rules, without mutating any selection state.
    pub fn predicted_next_track_id(&self) -> Option<u32> {
        self.predicted_next_index().and_then(|i| self.tracks.get(i).copied())
    }

    fn predicted_next_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        match self.repeat_mode {
            RepeatMode::Track => self.current_index,
            _ => {
                let current = self.current_index?;
                if self.shuffle {
                    self.shuffle_order
                        .get(self.shuffle_position + 1)
                        .copied()
                        .or_else(|| {
                            if self.repeat_mode == RepeatMode::Queue {
                                self.shuffle_order.first().copied()
                            } else {
                                None
                            }
                        })
                } else {
                    let next = current + 1;
                    if next < self.tracks.len() {
                        Some(next)
                    } else if self.repeat_mode == RepeatMode::Queue {
                        Some(0)
                    } else {
                        None
                    }
                }
            }
        }
    }

    /// Advances selection and returns the new current index, or `None` if
    /// the queue has ended (no repeat).
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.predicted_next_index()?;
        if self.shuffle {
            self.shuffle_position = self
                .shuffle_order
                .iter()
                .position(|&i| i == next)
                .unwrap_or(0);
        }
        self.current_index = Some(next);
        Some(next)
    }

    fn regenerate_shuffle_order(&mut self) {
        // Deterministic pseudo-shuffle: a fixed-stride permutation rather
        // than an RNG dependency the queue has no other use for. Stable
        // across consecutive `next` calls because the order itself doesn't
        // change until the queue contents do. `i * stride % n` only visits
        // every index exactly once when `stride` is coprime with `n` --
        // picking the stride without checking that (as a plain `n / 2`
        // would) collapses to a short cycle for most even `n`.
        let n = self.tracks.len();
        self.shuffle_order = (0..n).collect();
        if n > 2 {
            let stride = coprime_stride(n);
            self.shuffle_order = (0..n).map(|i| (i * stride) % n).collect();
        }
        self.shuffle_position = 0;
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// The smallest odd number `>= (n / 2).max(1)` that is coprime with `n`,
/// searched upward in steps of 2. Always terminates: some odd number below
/// `n` is always coprime with `n` (1, at worst).
fn coprime_stride(n: usize) -> usize {
    let mut stride = (n / 2).max(1) | 1;
    while gcd(stride, n) != 1 {
        stride += 2;
    }
    stride
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_is_idempotent() {
        let mut q = Queue {
            tracks: vec![1, 2, 3],
            current_index: Some(0),
            ..Default::default()
        };
        let (removed_first, _) = q.remove(2);
        let (removed_second, _) = q.remove(2);
        assert!(removed_first);
        assert!(!removed_second);
    }

    #[test]
    fn set_shuffle_twice_with_the_same_value_is_a_no_op() {
        let mut q = Queue {
            tracks: vec![1, 2, 3],
            current_index: Some(0),
            ..Default::default()
        };
        let first = q.set_shuffle(true);
        let second = q.set_shuffle(true);
        assert!(!second.predicted_next_changed || first.predicted_next_changed);
        assert_eq!(q.set_shuffle(true), MutationEffect { predicted_next_changed: false });
    }

    #[test]
    fn enqueue_after_current_changes_predicted_next_when_queue_was_at_its_end() {
        let mut q = Queue {
            tracks: vec![1],
            current_index: Some(0),
            ..Default::default()
        };
        assert!(q.predicted_next_track_id().is_none());
        let effect = q.enqueue(2);
        assert!(effect.predicted_next_changed);
        assert_eq!(q.predicted_next_track_id(), Some(2));
    }

    #[test]
    fn shuffle_order_is_a_full_permutation_for_every_small_queue_length() {
        for n in 3..=16usize {
            let mut q = Queue {
                tracks: (0..n as u32).collect(),
                current_index: Some(0),
                ..Default::default()
            };
            q.set_shuffle(true);
            let mut seen: Vec<usize> = q.shuffle_order.clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..n).collect::<Vec<_>>(), "n={n} shuffle_order={:?}", q.shuffle_order);
        }
    }

    #[test]
    fn shuffle_visits_every_track_exactly_once_per_pass() {
        let mut q = Queue {
            tracks: vec![10, 20, 30, 40],
            current_index: Some(0),
            ..Default::default()
        };
        q.set_shuffle(true);
        let mut visited = vec![q.tracks[q.current_index.unwrap()]];
        while let Some(idx) = q.advance() {
            visited.push(q.tracks[idx]);
            if visited.len() == q.tracks.len() {
                break;
            }
        }
        visited.sort_unstable();
        assert_eq!(visited, vec![10, 20, 30, 40]);
    }
}
