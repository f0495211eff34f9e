//! Per-title compatibility overrides, keyed by exact program id.

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleOverride {
    pub program_ids: &'static [u64],
    pub display_transfer_hack: Option<bool>,
    pub skip_slow_draw: Option<bool>,
    pub texture_load_hack: Option<bool>,
    /// The title expects its `SystemData.bin` save file to exist before first boot.
    pub ensure_system_save_data: bool,
}

impl TitleOverride {
    fn apply(&self, settings: &mut Settings) {
        if let Some(value) = self.display_transfer_hack {
            settings.display_transfer_hack = value;
        }
        if let Some(value) = self.skip_slow_draw {
            settings.skip_slow_draw = value;
        }
        if let Some(value) = self.texture_load_hack {
            settings.texture_load_hack = value;
        }
    }
}

pub const TITLE_OVERRIDES: &[TitleOverride] = &[
    TitleOverride {
        program_ids: &[0x0004_0000_0006_8B00, 0x0004_0000_0006_1300, 0x0004_0000_0004_A700],
        display_transfer_hack: Some(true),
        skip_slow_draw: Some(true),
        texture_load_hack: Some(false),
        ensure_system_save_data: false,
    },
    TitleOverride {
        program_ids: &[0x0004_0000_001D_3A00],
        display_transfer_hack: None,
        skip_slow_draw: None,
        texture_load_hack: None,
        ensure_system_save_data: true,
    },
];

pub fn find_title_override(program_id: u64) -> Option<&'static TitleOverride> {
    TITLE_OVERRIDES
        .iter()
        .find(|entry| entry.program_ids.contains(&program_id))
}

/// Applies the override registered for `program_id`, if any, and returns it.
pub fn apply_title_overrides(
    settings: &mut Settings,
    program_id: u64,
) -> Option<&'static TitleOverride> {
    let entry = find_title_override(program_id)?;
    entry.apply(settings);
    tracing::debug!(program_id = format_args!("{program_id:016X}"), "applied title override");
    Some(entry)
}
