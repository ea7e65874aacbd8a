//! Assembly of the diff payload sent to the summarizer.

/// Concatenate the per-file patches of a pull request into a single diff
/// payload, separated by newlines.
///
/// Files without a textual patch (binary files, very large files) carry no
/// `patch` field in the GitHub response and are skipped.
pub fn join_patches<'a, I>(patches: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    patches
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}
