pub(crate) mod answers;
pub(crate) mod results;
pub(crate) mod sessions;
