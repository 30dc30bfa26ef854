pub mod clock;
pub mod feature;
pub mod league;
pub mod pattern;

pub use clock::{eastern_date, eastern_today};
pub use feature::{FeatureValue, GameFeatureRow};
pub use league::League;
pub use pattern::*;
