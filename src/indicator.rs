/// Per-cell status of an exchanged value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Indicator {
    /// The cell holds a regular value.
    Ok,
    /// The cell is SQL NULL. The bound variable is left untouched.
    ///
    /// This is also the default, so an indicator observed after a failed
    /// fetch is in a well defined state.
    #[default]
    Null,
    /// The cell holds a value the driver had to cut short.
    Truncated,
}

impl Indicator {
    pub fn is_null(self) -> bool {
        self == Indicator::Null
    }
}
