//! Routes that sit behind the session extractor and role gates.

pub mod users;
