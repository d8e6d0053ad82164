use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, sleep};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct DaemonGuard {
    child: Child,
    lines: Receiver<String>,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path, args: &[&str]) -> DaemonGuard {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jpgconverter"))
        .args(args)
        .env("HOME", home)
        .env_remove("JPGCONVERTER_DIR")
        .env_remove("JPGCONVERTER_LOG_DIR")
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn jpgconverter");

    let stdout = child.stdout.take().expect("stdout was not piped");
    let (tx, lines) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    DaemonGuard { child, lines }
}

fn watch_dir(home: &Path) -> PathBuf {
    home.join("Documents").join("JPGconverter")
}

fn wait_for_line(daemon: &DaemonGuard, needle: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match daemon.lines.recv_timeout(remaining) {
            Ok(line) if line.contains(needle) => return line,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    panic!("Timed out waiting for log line containing {needle:?}");
}

fn wait_for_path(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for {}", path.display());
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().expect("Failed to poll daemon") {
            return status;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Daemon did not exit in time");
}

#[test]
fn creates_default_folder_and_lowercases_new_files() {
    let home = TempDir::new().unwrap();
    let daemon = spawn_daemon(home.path(), &["--poll-interval-ms", "50"]);
    wait_for_line(&daemon, "Watching folder", Duration::from_secs(10));

    let dir = watch_dir(home.path());
    assert!(dir.is_dir());

    fs::create_dir(dir.join("NewFolder")).unwrap();
    fs::write(dir.join("already.jpg"), b"lower").unwrap();

    let mut photo = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("Photo.JPG"))
        .unwrap();
    photo.write_all(&[0xFF; 1024]).unwrap();
    sleep(Duration::from_millis(50));
    photo.write_all(&[0xD9; 1024]).unwrap();
    drop(photo);

    wait_for_path(&dir.join("photo.jpg"), Duration::from_secs(10));
    wait_for_line(&daemon, "Renamed file", Duration::from_secs(5));

    assert!(!dir.join("Photo.JPG").exists());
    assert_eq!(fs::metadata(dir.join("photo.jpg")).unwrap().len(), 2048);
    assert!(dir.join("NewFolder").is_dir());
    assert!(!dir.join("newfolder").exists());
    assert_eq!(fs::read(dir.join("already.jpg")).unwrap(), b"lower");
}

#[test]
fn dir_flag_watches_custom_folder() {
    let home = TempDir::new().unwrap();
    let custom = home.path().join("drop");
    let custom_arg = custom.to_string_lossy().to_string();
    let daemon = spawn_daemon(
        home.path(),
        &["--dir", &custom_arg, "--poll-interval-ms", "50"],
    );
    wait_for_line(&daemon, "Watching folder", Duration::from_secs(10));

    fs::write(custom.join("IMG_0001.JPG"), b"jpeg").unwrap();

    wait_for_path(&custom.join("img_0001.jpg"), Duration::from_secs(10));
    assert!(!watch_dir(home.path()).exists());
}

#[test]
fn files_moved_into_folder_are_lowercased() {
    let home = TempDir::new().unwrap();
    let staging = home.path().join("Downloads");
    fs::create_dir(&staging).unwrap();
    fs::write(staging.join("Scan_01.PNG"), b"png").unwrap();

    let daemon = spawn_daemon(home.path(), &["--poll-interval-ms", "50"]);
    wait_for_line(&daemon, "Watching folder", Duration::from_secs(10));

    let dir = watch_dir(home.path());
    fs::rename(staging.join("Scan_01.PNG"), dir.join("Scan_01.PNG")).unwrap();

    wait_for_path(&dir.join("scan_01.png"), Duration::from_secs(10));
    assert!(!dir.join("Scan_01.PNG").exists());
    assert_eq!(fs::read(dir.join("scan_01.png")).unwrap(), b"png");
}

#[test]
fn sigterm_stops_daemon_cleanly() {
    let home = TempDir::new().unwrap();
    let mut daemon = spawn_daemon(home.path(), &[]);
    wait_for_line(&daemon, "Watching folder", Duration::from_secs(10));

    let pid = daemon.child.id() as libc::pid_t;
    assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);

    let status = wait_for_exit(&mut daemon.child, Duration::from_secs(5));
    assert!(status.success(), "unexpected exit status: {status:?}");
}

#[test]
fn file_in_place_of_folder_is_fatal() {
    let home = TempDir::new().unwrap();
    let bogus = home.path().join("not-a-folder");
    fs::write(&bogus, b"").unwrap();
    let bogus_arg = bogus.to_string_lossy().to_string();

    let mut daemon = spawn_daemon(home.path(), &["--dir", &bogus_arg]);

    let status = wait_for_exit(&mut daemon.child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(1));
}
