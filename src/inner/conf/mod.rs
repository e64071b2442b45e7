pub(crate) mod cmd_args;
pub(crate) mod dto;
pub(crate) mod filter;
