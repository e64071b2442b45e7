pub(crate) mod peripheral;
pub(crate) mod request;
pub(crate) mod request_plan;
