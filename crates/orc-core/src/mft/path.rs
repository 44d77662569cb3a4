/// Resolves `(frn, file_name)` pairs into full UTF-16-safe paths by
/// climbing the parent chain, per §4.4.
use super::attribute::FileNameAttribute;
use super::frn::{Frn, ROOT_FRN};
use super::store::MftStore;
use compact_str::CompactString;
use std::collections::{HashMap, HashSet};

const MAX_CLIMB_DEPTH: usize = 1024;

/// `FRN -> (parent FRN, primary $FILE_NAME)` — the resolver's working index,
/// populated incrementally by the walker as records are visited.
#[derive(Default)]
pub struct PathResolver {
    index: HashMap<Frn, (Frn, CompactString)>,
    /// In-scope FRNs derived from configured subpaths; empty means "all".
    location_roots: HashSet<Frn>,
    volume_label: CompactString,
}

/// Outcome of climbing a parent chain to build a path.
pub struct ResolvedPath {
    pub full_path: String,
    /// `true` if the climb hit a break (unresolved parent) before reaching
    /// the volume root.
    pub broken: bool,
}

impl PathResolver {
    pub fn new(volume_label: impl Into<CompactString>) -> Self {
        Self {
            index: HashMap::new(),
            location_roots: HashSet::new(),
            volume_label: volume_label.into(),
        }
    }

    pub fn set_location_roots(&mut self, roots: HashSet<Frn>) {
        self.location_roots = roots;
    }

    /// Record a resolved `(frn, parent, name)` triple so later climbs can
    /// use it. Called by the walker as records are visited.
    pub fn index_record(&mut self, frn: Frn, parent: Frn, name: impl Into<CompactString>) {
        self.index.entry(frn).or_insert((parent, name.into()));
    }

    /// Whether `frn` (or any resolvable ancestor) falls within the
    /// configured subtree filter.
    pub fn in_scope(&self, frn: Frn) -> bool {
        if self.location_roots.is_empty() {
            return true;
        }
        let mut current = frn;
        let mut depth = 0;
        loop {
            if self.location_roots.contains(&current) {
                return true;
            }
            if current.is_root() || depth >= MAX_CLIMB_DEPTH {
                return false;
            }
            match self.index.get(&current) {
                Some((parent, _)) => {
                    current = *parent;
                    depth += 1;
                }
                None => return false,
            }
        }
    }

    /// Build the full path for `file_name`, climbing the parent chain from
    /// `file_name.parent`. Cycle-breaking stops the climb after
    /// `MAX_CLIMB_DEPTH` segments and treats it as a synthetic-placeholder
    /// break, matching unresolved-parent handling.
    pub fn resolve(&self, frn: Frn, file_name: &FileNameAttribute) -> ResolvedPath {
        let mut segments: Vec<CompactString> = Vec::new();
        let mut current = file_name.parent;
        let mut visited: HashSet<Frn> = HashSet::new();
        visited.insert(frn);
        let mut broken = false;

        loop {
            if current.is_root() {
                break;
            }
            if visited.contains(&current) || visited.len() >= MAX_CLIMB_DEPTH {
                broken = true;
                break;
            }
            visited.insert(current);
            match self.index.get(&current) {
                Some((parent, name)) => {
                    segments.push(name.clone());
                    current = *parent;
                }
                None => {
                    segments.push(CompactString::new(current.placeholder_segment()));
                    broken = true;
                    break;
                }
            }
        }

        segments.reverse();
        let mut full_path = format!("\\\\.\\{}\\", self.volume_label);
        for seg in &segments {
            full_path.push_str(seg);
            full_path.push('\\');
        }
        full_path.push_str(&file_name.name);

        ResolvedPath { full_path, broken }
    }

    /// Convenience that pulls the file-name record straight out of a store's
    /// logical-attribute cache; used by callers that only have a FRN.
    pub fn resolve_from_store(&self, store: &MftStore, frn: Frn) -> Vec<ResolvedPath> {
        let Ok(attrs) = store.attributes(frn) else {
            return Vec::new();
        };
        attrs
            .file_names
            .iter()
            .map(|fname| self.resolve(frn, fname))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mft::attribute::FileNameNamespace;

    fn fname(parent: Frn, name: &str) -> FileNameAttribute {
        FileNameAttribute {
            parent,
            name: CompactString::new(name),
            namespace: FileNameNamespace::Win32,
            logical_size: 0,
            physical_size: 0,
        }
    }

    #[test]
    fn resolves_direct_child_of_root() {
        let resolver = PathResolver::new("Volume{abc}");
        let resolved = resolver.resolve(Frn::new(10, 1), &fname(ROOT_FRN, "foo.txt"));
        assert_eq!(resolved.full_path, "\\\\.\\Volume{abc}\\foo.txt");
        assert!(!resolved.broken);
    }

    #[test]
    fn resolves_nested_path_via_index() {
        let mut resolver = PathResolver::new("Volume{abc}");
        let dir_frn = Frn::new(20, 1);
        resolver.index_record(dir_frn, ROOT_FRN, "sub");
        let resolved = resolver.resolve(Frn::new(21, 1), &fname(dir_frn, "bar.txt"));
        assert_eq!(resolved.full_path, "\\\\.\\Volume{abc}\\sub\\bar.txt");
        assert!(!resolved.broken);
    }

    #[test]
    fn unresolved_parent_gets_placeholder() {
        let resolver = PathResolver::new("Volume{abc}");
        let missing_parent = Frn::new(99, 1);
        let resolved = resolver.resolve(Frn::new(21, 1), &fname(missing_parent, "bar.txt"));
        assert!(resolved.broken);
        assert!(resolved.full_path.contains(&missing_parent.placeholder_segment()));
    }

    #[test]
    fn empty_location_roots_means_all_in_scope() {
        let resolver = PathResolver::new("Volume{abc}");
        assert!(resolver.in_scope(Frn::new(5, 0)));
    }

    #[test]
    fn location_filter_restricts_to_subtree() {
        let mut resolver = PathResolver::new("Volume{abc}");
        let dir_frn = Frn::new(20, 1);
        resolver.index_record(dir_frn, ROOT_FRN, "sub");
        let mut roots = HashSet::new();
        roots.insert(dir_frn);
        resolver.set_location_roots(roots);

        let child_frn = Frn::new(21, 1);
        resolver.index_record(child_frn, dir_frn, "bar.txt");
        assert!(resolver.in_scope(child_frn));

        let unrelated_frn = Frn::new(22, 1);
        resolver.index_record(unrelated_frn, ROOT_FRN, "baz.txt");
        assert!(!resolver.in_scope(unrelated_frn));
    }
}
