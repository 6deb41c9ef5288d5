mod helpers;
mod ideas;
mod labels;

pub(crate) use ideas::cmd_ideas;
pub(crate) use labels::{cmd_labels, cmd_reap};
