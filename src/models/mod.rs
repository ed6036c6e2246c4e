mod summary;
mod video;

pub use summary::{
    JobState, Requester, SummarizationJob, SummaryRecord, SummaryView, SYSTEM_USER_ID,
    SYSTEM_USER_NAME,
};
pub use video::{parse_video_id, watch_url};
