mod apply;
mod collector;
mod config;
mod exif_reader;
mod metadata;
mod planner;
mod sanitize;
mod sequence;
mod template;

pub const DEFAULT_TEMPLATE: &str = "{YYYY}-{MM}-{DD}_{hh}{mm}{ss}_{Seq}";

pub use apply::{apply_plan, ApplyResult, RenameOperation};
pub use collector::{collect_files, Collected, ScanStats};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use exif_reader::{detect_image_format, read_exif_metadata};
pub use metadata::{ImageFormat, MetadataSource, PartialMetadata, PhotoMetadata};
pub use planner::{
    generate_plan, PlanOptions, RenameCandidate, RenamePlan, RenameStats, SkipReason, SkippedFile,
};
pub use sequence::{SequenceCounter, DEFAULT_SEQUENCE_WIDTH};
pub use template::{
    parse_template, render_template, uses_token, validate_template, TemplateError, TemplatePart,
    Token,
};
