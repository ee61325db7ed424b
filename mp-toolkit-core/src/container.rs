/// Container formats a game image can be classified into.
///
/// The kind is derived by [`crate::image::classify`] and never re-derived
/// later in the pipeline. `WiiDisc` and `Wbfs` go through the same
/// extract/patch/repack steps; they stay distinct so logs and the CLI can
/// report what the user actually handed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    N64Rom,
    WiiDisc,
    Wbfs,
    GameCubeIso,
}

const ALL_KINDS: &[ContainerKind] = &[
    ContainerKind::N64Rom,
    ContainerKind::WiiDisc,
    ContainerKind::Wbfs,
    ContainerKind::GameCubeIso,
];

impl ContainerKind {
    pub fn all() -> &'static [ContainerKind] {
        ALL_KINDS
    }

    /// Short identifier used in logs and CLI output.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::N64Rom => "n64-rom",
            Self::WiiDisc => "wii-disc",
            Self::Wbfs => "wbfs",
            Self::GameCubeIso => "gc-iso",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::N64Rom => "Nintendo 64 ROM",
            Self::WiiDisc => "Wii disc image",
            Self::Wbfs => "Wii WBFS image",
            Self::GameCubeIso => "GameCube disc image",
        }
    }

    /// Extension (without dot) of the repacked artifact.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::N64Rom => "z64",
            Self::WiiDisc | Self::Wbfs => "wbfs",
            Self::GameCubeIso => "iso",
        }
    }

    /// File-type filter shown in the save dialog.
    pub fn filter_description(&self) -> &'static str {
        match self {
            Self::N64Rom => "Z64 Files (*.z64)",
            Self::WiiDisc | Self::Wbfs => "WBFS Files (*.wbfs)",
            Self::GameCubeIso => "ISO Files (*.iso)",
        }
    }

    /// Whether the format is a disc that must be extracted and repacked.
    pub fn has_container_phase(&self) -> bool {
        !matches!(self, Self::N64Rom)
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wii_and_wbfs_share_output_format() {
        assert_eq!(
            ContainerKind::WiiDisc.output_extension(),
            ContainerKind::Wbfs.output_extension()
        );
        assert_eq!(
            ContainerKind::WiiDisc.filter_description(),
            ContainerKind::Wbfs.filter_description()
        );
    }

    #[test]
    fn only_n64_skips_container_phase() {
        for &kind in ContainerKind::all() {
            assert_eq!(kind.has_container_phase(), kind != ContainerKind::N64Rom);
        }
    }

    #[test]
    fn filters_mention_their_extension() {
        for &kind in ContainerKind::all() {
            let pattern = format!("*.{}", kind.output_extension());
            assert!(
                kind.filter_description().contains(&pattern),
                "{:?} filter should mention {}",
                kind,
                pattern
            );
        }
    }
}
