//! Manual corrections for known upstream data-quality defects.
//!
//! Kept as an enumerable table applied in one place post-merge, so
//! every correction is auditable and new ones are a single entry.

use crate::models::Reforge;

/// One stat relabeling: when `reforge`'s stat block for `rarity`
/// carries `from` with exactly the `trigger` value, the value moves to
/// the `to` stat.
#[derive(Debug)]
pub struct StatCorrection {
    pub reforge: &'static str,
    pub rarity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub trigger: f64,
}

/// Known defects in the upstream reference data.
pub const CORRECTIONS: &[StatCorrection] = &[
    // Ancient/COMMON ships +3 crit_damage that is really crit_chance.
    StatCorrection {
        reforge: "Ancient",
        rarity: "COMMON",
        from: "crit_damage",
        to: "crit_chance",
        trigger: 3.0,
    },
];

/// Apply the correction table to a merged reforge list.
pub(crate) fn apply_corrections(reforges: &mut [Reforge]) {
    for correction in CORRECTIONS {
        for reforge in reforges
            .iter_mut()
            .filter(|r| r.reforge_name == correction.reforge)
        {
            let Some(stats) = reforge.reforge_stats.get_mut(correction.rarity) else {
                continue;
            };
            if stats.get(correction.from) == Some(&correction.trigger) {
                stats.remove(correction.from);
                stats.insert(correction.to.to_string(), correction.trigger);
            }
        }
    }
}
