pub mod hyperloglog;
