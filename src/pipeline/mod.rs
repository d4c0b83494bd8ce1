pub mod extract;
pub mod match_details;
pub mod poller;
pub mod top_matches;
pub mod update;
