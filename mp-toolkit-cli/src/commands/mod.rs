pub(crate) mod classify;
pub(crate) mod config;
pub(crate) mod inject;
pub(crate) mod tools;

use mp_toolkit_lib::SettingsOverrides;

use crate::cli_types::LocationArgs;

impl From<&LocationArgs> for SettingsOverrides {
    fn from(args: &LocationArgs) -> Self {
        Self {
            tools_dir: args.tools_dir.clone(),
            scratch_dir: args.scratch_dir.clone(),
            timeout_secs: args.timeout,
        }
    }
}
