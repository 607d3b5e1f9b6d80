pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod results;
pub(crate) mod router;
pub(crate) mod sessions;

#[cfg(test)]
mod tests;
