//! Pattern pipeline: binning, matching, ROI and trend scoring (no IO).

pub mod binning;
pub mod consensus;
pub mod discovery;
pub mod matcher;
pub mod roi;

pub use binning::{bin_feature, join_combo, BINNING_RULES_VERSION};
pub use consensus::{parse_record, score_matchup, ConsensusScore, Situation, SituationLine, TeamSituations};
pub use discovery::{combo_stats, discover_combos, ComboStats};
pub use matcher::{combo_for, find_matches, lines_from_row, MatchCandidate};
pub use roi::{bet_roi, calculate_roi, RoiTally};
