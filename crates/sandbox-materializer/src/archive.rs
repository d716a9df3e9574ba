use tar::{Builder, Header};

/// Builds a tar archive containing exactly one regular file at `path`
/// (a path relative to `/`, e.g. `workspace/main.py`).
///
/// Used for every content write so the extract is a single atomic
/// replace from the runtime's point of view.
pub(crate) fn single_file_tar(path: &str, content: &[u8]) -> Vec<u8> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let mut builder = Builder::new(Vec::new());
    builder
        .append_data(&mut header, path, content)
        .expect("in-memory tar append cannot fail");
    builder.into_inner().expect("in-memory tar has no I/O to flush")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn single_file_tar_round_trips() {
        let bytes = single_file_tar("workspace/main.py", b"print('hi')\n");
        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), "workspace/main.py");
        let mut out = Vec::new();
        entry.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"print('hi')\n");
    }
}
