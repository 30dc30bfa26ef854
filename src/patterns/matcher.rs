//! Matching today's games against saved patterns (no database IO).

use tracing::{debug, warn};

use super::binning::{bin_feature, join_combo, BINNING_RULES_VERSION};
use crate::domain::{BettingLines, FeatureValue, GameFeatureRow, SavedPattern};
use crate::validation::validate_american_odds;

/// Combo key for a game under an ordered feature list.
///
/// Pure in (feature order, feature values): this is the single function
/// used both when labelling history at save time and when matching today.
pub fn combo_for(features: &[String], row: &GameFeatureRow) -> String {
    join_combo(
        features
            .iter()
            .map(|name| bin_feature(name, row.feature(name))),
    )
}

/// A pattern/game pair whose combos are equal
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub pattern: &'a SavedPattern,
    pub game: &'a GameFeatureRow,
}

/// Whether a pattern can be evaluated with the current binning rules
pub fn is_current_version(pattern: &SavedPattern) -> bool {
    pattern.binning_version == BINNING_RULES_VERSION
}

/// Every (pattern, game) pair whose recomputed combo equals the stored combo.
///
/// Patterns saved under another binning version are skipped: their combos
/// were produced by different thresholds and would match arbitrarily.
pub fn find_matches<'a>(
    patterns: &'a [SavedPattern],
    games: &'a [GameFeatureRow],
) -> Vec<MatchCandidate<'a>> {
    let mut out = Vec::new();
    if patterns.is_empty() || games.is_empty() {
        return out;
    }

    for pattern in patterns {
        if !is_current_version(pattern) {
            warn!(
                pattern_id = %pattern.id,
                pattern_version = pattern.binning_version,
                current_version = BINNING_RULES_VERSION,
                "skipping pattern saved under a different binning version"
            );
            continue;
        }
        if pattern.features.is_empty() {
            warn!(pattern_id = %pattern.id, "skipping pattern with no features");
            continue;
        }

        for game in games {
            let combo = combo_for(&pattern.features, game);
            if combo == pattern.combo {
                debug!(pattern_id = %pattern.id, game_id = %game.game_id, %combo, "pattern matched");
                out.push(MatchCandidate { pattern, game });
            }
        }
    }

    out
}

/// Larger prices are feed errors, not odds
const MAX_AMERICAN_PRICE: f64 = 100_000.0;

fn american_price(v: &FeatureValue) -> Option<i32> {
    let raw = v.as_f64().filter(|p| p.is_finite())?.round();
    if raw.abs() > MAX_AMERICAN_PRICE {
        debug!(price = raw, "ignoring out-of-range line price");
        return None;
    }
    let price = raw as i32;
    match validate_american_odds(price, "price") {
        Ok(()) => Some(price),
        Err(e) => {
            debug!(error = %e, "ignoring line price");
            None
        }
    }
}

fn line_value(v: &FeatureValue) -> Option<f64> {
    v.as_f64().filter(|p| p.is_finite())
}

/// Lines carried on the feature-view snapshot itself; used when the live
/// lines table has nothing for the game.
pub fn lines_from_row(row: &GameFeatureRow) -> BettingLines {
    BettingLines {
        primary_ml: american_price(row.feature("primary_ml")),
        opponent_ml: american_price(row.feature("opponent_ml")),
        primary_rl: line_value(row.feature("primary_rl")),
        primary_rl_price: american_price(row.feature("primary_rl_price")),
        opponent_rl_price: american_price(row.feature("opponent_rl_price")),
        o_u_line: line_value(row.feature("o_u_line")),
        over_price: american_price(row.feature("over_price")),
        under_price: american_price(row.feature("under_price")),
    }
}
