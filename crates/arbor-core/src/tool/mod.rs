//! Provider-agnostic tool-call handling: schemas, validation, execution and
//! reassembly of streamed calls.

mod assembler;
mod executor;
mod schema;
mod validation;

pub use assembler::{RawToolCall, ToolCallAssembler, ToolCallDelta};
pub use executor::{
    ToolExecutor, ToolImplementation, ToolProgress, ToolStatusUpdate, UNEXPECTED_FAILURE,
};
pub use schema::{
    CONTENT_PARAM, ParamSpec, ParamType, QUERY_PARAM, READ_FILE, RELATIVE_PATH_PARAM, ToolSchema,
    ToolSchemaRegistry, WEB_SEARCH, WRITE_TO_FILE, json_type_name,
};
pub use validation::{ToolValidation, is_viable_tool_call};
