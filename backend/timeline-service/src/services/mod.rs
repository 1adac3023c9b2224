pub mod activity;
pub mod pull;
pub mod timeline;

pub use activity::{is_active, ActiveUserFilter};
pub use pull::{ComplexityStats, FanoutRecommendation, PullTimelineService};
pub use timeline::TimelineService;
