/// Process exit codes. Printing usage is not a failure.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const CONVERSION_FAILURE: i32 = 1;
}
