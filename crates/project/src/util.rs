use std::fs;
use std::io;
use std::path::Path;

/// Writes data atomically: a sibling temp file is written, synced, then renamed over `path`.
/// The temp file is removed again when any step fails.
/// 先寫入同目錄的暫存檔並同步，再以 rename 取代目標檔；失敗時刪除暫存檔。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp_path = path.with_file_name(tmp_name);

    let result = write_synced(&tmp_path, data).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(&file);
    writer.write_all(data)?;
    writer.flush()?;
    drop(writer);
    file.sync_all()
}
