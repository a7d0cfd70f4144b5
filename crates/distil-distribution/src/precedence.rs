/// Where a [`crate::Distribution`] came from, used to break ties among
/// equal-version candidates. Higher precedence wins.
///
/// Declaration order doubles as rank order (derived `Ord` compares variants by
/// declaration position), so `Precedence::Develop` is always the highest.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Precedence {
    /// A source checkout with no build step applied yet.
    Checkout,
    /// A source archive (sdist) that must be built before use.
    SourceArchive,
    /// A prebuilt binary archive (egg).
    BinaryArchive,
    /// An in-place "development" installation: always wins ties (spec §4.4.1 step 4).
    Develop,
}
