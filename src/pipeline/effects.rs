//! Effect aggregation and the numbered effect table.
//!
//! `{n}` markers in a message select entries of [`EFFECTS`]. Markers seen
//! before a segment are counted into an [`EffectPlan`], clamped to the
//! configured ceiling, and expanded into one sox transform chain.

use std::collections::BTreeMap;

use crate::dsp::{Transform, TransformChain};

/// One numbered effect: appends its transforms to a chain.
pub struct EffectEntry {
    pub id: u32,
    pub name: &'static str,
    pub apply: fn(&mut TransformChain),
}

pub static EFFECTS: &[EffectEntry] = &[
    EffectEntry {
        id: 1,
        name: "room echo",
        apply: |chain| {
            chain.push(Transform::Reverb {
                reverberance: 50.0,
                room_scale: 25.0,
                wet_gain: 0.0,
            });
        },
    },
    EffectEntry {
        id: 2,
        name: "hall echo",
        apply: |chain| {
            chain.push(Transform::Reverb {
                reverberance: 75.0,
                room_scale: 75.0,
                wet_gain: 1.0,
            });
        },
    },
    EffectEntry {
        id: 3,
        name: "outside echo",
        apply: |chain| {
            chain.push(Transform::Reverb {
                reverberance: 5.0,
                room_scale: 5.0,
                wet_gain: 0.0,
            });
        },
    },
    EffectEntry {
        id: 4,
        name: "pitch down",
        apply: |chain| {
            chain.push(Transform::Pitch { semitones: -5.0 });
        },
    },
    EffectEntry {
        id: 5,
        name: "pitch up",
        apply: |chain| {
            chain.push(Transform::Pitch { semitones: 5.0 });
        },
    },
    EffectEntry {
        id: 6,
        name: "telephone",
        apply: |chain| {
            chain
                .push(Transform::Highpass { frequency: 800.0 })
                .push(Transform::Gain { db: 2.0 });
        },
    },
    EffectEntry {
        id: 7,
        name: "muffled",
        apply: |chain| {
            chain
                .push(Transform::Lowpass { frequency: 1200.0 })
                .push(Transform::Gain { db: 1.0 });
        },
    },
    EffectEntry {
        id: 8,
        name: "quieter",
        apply: |chain| {
            chain.push(Transform::Gain { db: -20.0 });
        },
    },
    EffectEntry {
        id: 9,
        name: "ghost",
        apply: |chain| {
            chain
                .push(Transform::Pad {
                    start: 0.5,
                    end: 0.5,
                })
                .push(Transform::Reverse)
                .push(Transform::Reverb {
                    reverberance: 50.0,
                    room_scale: 100.0,
                    wet_gain: 1.0,
                })
                .push(Transform::Reverse)
                .push(Transform::reverb(50.0));
        },
    },
    EffectEntry {
        id: 10,
        name: "chorus",
        apply: |chain| {
            chain.push(Transform::Chorus);
        },
    },
    EffectEntry {
        id: 11,
        name: "slow down",
        apply: |chain| {
            chain.push(Transform::Tempo { factor: 0.5 });
        },
    },
    EffectEntry {
        id: 12,
        name: "speed up",
        apply: |chain| {
            chain.push(Transform::Tempo { factor: 1.5 });
        },
    },
];

pub fn lookup(id: u32) -> Option<&'static EffectEntry> {
    EFFECTS.iter().find(|entry| entry.id == id)
}

/// Per-segment effect counts, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectPlan {
    counts: BTreeMap<u32, u32>,
}

impl EffectPlan {
    #[cfg(test)]
    pub fn get(&self, id: u32) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.iter().map(|(&id, &count)| (id, count))
    }

    /// Expand into transforms: every repetition of one id, then the next id.
    /// Ids missing from the table contribute nothing.
    pub fn to_chain(&self) -> TransformChain {
        let mut chain = TransformChain::new();
        for (id, count) in self.iter() {
            let Some(entry) = lookup(id) else {
                tracing::debug!("Ignoring unknown effect {{{id}}}");
                continue;
            };
            tracing::debug!("Applying {} x{count}", entry.name);
            for _ in 0..count {
                (entry.apply)(&mut chain);
            }
        }
        chain
    }
}

/// Count effect ids, clamping each count to `max_repetitions` when set.
pub fn aggregate(effect_ids: &[u32], max_repetitions: Option<u32>) -> EffectPlan {
    let mut counts = BTreeMap::new();
    for &id in effect_ids {
        *counts.entry(id).or_insert(0u32) += 1;
    }
    if let Some(max) = max_repetitions {
        for count in counts.values_mut() {
            *count = (*count).min(max);
        }
    }
    EffectPlan { counts }
}
