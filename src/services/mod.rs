pub(crate) mod answers;
pub(crate) mod cascade;
pub(crate) mod errors;
pub(crate) mod grading;
pub(crate) mod lifecycle;
pub(crate) mod transitions;
