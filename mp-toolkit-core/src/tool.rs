/// Logical identifiers for the bundled external tools.
///
/// Several logical tools share one binary (`wit` extracts and repacks Wii
/// discs, `pyisotools` does the same for GameCube ISOs). The logical name is
/// what shows up in errors and logs; the binary stem is what gets resolved
/// on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    DiscExtractor,
    DiscRepacker,
    GeckoPatcher,
    GsPatcher,
    IsoExtractor,
    IsoRepacker,
}

const ALL_TOOLS: &[Tool] = &[
    Tool::DiscExtractor,
    Tool::DiscRepacker,
    Tool::GeckoPatcher,
    Tool::GsPatcher,
    Tool::IsoExtractor,
    Tool::IsoRepacker,
];

impl Tool {
    /// All tools in pipeline order.
    pub fn all() -> &'static [Tool] {
        ALL_TOOLS
    }

    /// Logical name used in error messages and the CLI tool listing.
    pub fn logical_name(&self) -> &'static str {
        match self {
            Self::DiscExtractor => "disc-extractor",
            Self::DiscRepacker => "disc-repacker",
            Self::GeckoPatcher => "dol-patcher-gecko",
            Self::GsPatcher => "dol-patcher-gs",
            Self::IsoExtractor => "iso-extractor",
            Self::IsoRepacker => "iso-repacker",
        }
    }

    /// File stem of the bundled executable (without any `.exe` suffix).
    pub fn binary_stem(&self) -> &'static str {
        match self {
            Self::DiscExtractor | Self::DiscRepacker => "wit",
            Self::GeckoPatcher => "GeckoLoader",
            Self::GsPatcher => "GSInject",
            Self::IsoExtractor | Self::IsoRepacker => "pyisotools",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.logical_name())
    }
}
