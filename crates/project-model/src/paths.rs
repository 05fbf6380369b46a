//! Path helpers for project-relative, forward-slash paths.

use std::path::{Component, Path, PathBuf};

/// Render a path with `/` separators regardless of platform.
pub fn to_forward_slashes(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            Component::RootDir => Some(String::new()),
            other => Some(other.as_os_str().to_string_lossy().into_owned()),
        })
        .collect();
    if parts.len() == 1 && parts[0].is_empty() {
        return "/".to_string();
    }
    parts.join("/")
}

/// Lexically remove `.` and resolve `..` against preceding components.
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Path of `target` relative to the directory `base`, both cleaned first.
///
/// Both paths must be of the same kind (both absolute or both relative to
/// the same directory) for the result to be meaningful.
pub fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target = clean(target);
    let base = clean(base);
    let t: Vec<Component<'_>> = target.components().collect();
    let b: Vec<Component<'_>> = base.components().collect();

    let common = t.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();

    let mut rel = PathBuf::new();
    for _ in common..b.len() {
        rel.push("..");
    }
    for component in &t[common..] {
        rel.push(component.as_os_str());
    }
    rel
}

/// Forward-slash string of `target` relative to `base`.
pub fn relative_string(target: &Path, base: &Path) -> String {
    to_forward_slashes(&relative_to(target, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_walk_up_and_down() {
        let rel = relative_string(
            Path::new("/proj/assets/chars/hero.abc"),
            Path::new("/proj/shots/sh010"),
        );
        assert_eq!(rel, "../../assets/chars/hero.abc");

        let rel = relative_string(Path::new("/proj/shots/x.json"), Path::new("/proj/shots"));
        assert_eq!(rel, "x.json");
    }

    #[test]
    fn clean_resolves_parent_components() {
        assert_eq!(
            clean(Path::new("/proj/shots/../assets/./a.abc")),
            PathBuf::from("/proj/assets/a.abc")
        );
        assert_eq!(clean(Path::new("../a/b/..")), PathBuf::from("../a"));
    }
}
