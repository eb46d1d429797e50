pub(crate) mod human_readable;
