//! Application-wide constants and default values
//!
//! Centralized location for hard-coded values

/// Document file constants
pub mod file {
    /// Extension of native documents
    pub const DOCUMENT_EXTENSION: &str = "ndz";

    /// Extension of exported Python scripts
    pub const EXPORT_EXTENSION: &str = "py";

    /// Name of the configuration directory under the user config dir
    pub const CONFIG_DIR_NAME: &str = "nodezator";

    /// Configuration file inside [`CONFIG_DIR_NAME`]
    pub const CONFIG_FILE_NAME: &str = "config.json";
}

/// Category colour constants
pub mod palette {
    /// Number of distinct category colours
    pub const DEFAULT_PALETTE_SIZE: usize = 8;
}

/// Graph editing constants
pub mod graph {
    /// Offset applied to duplicated objects, in canvas units
    pub const DEFAULT_DUPLICATE_OFFSET: [i32; 2] = [20, 20];
}

/// Python literal limits
pub mod literal {
    /// Deepest container nesting the literal parser accepts
    pub const MAX_NESTING: usize = 256;

    /// Largest element count (or byte length for strings) a repetition may produce
    pub const REPEAT_LIMIT: usize = 10_000_000;
}
