use super::*;
use tempfile::tempdir;

#[test]
fn create_makes_a_one_page_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");

    PageFile::create(&path).unwrap();
    let pf = PageFile::open(&path).unwrap();
    assert_eq!(pf.total_pages(), 1);
}

#[test]
fn open_missing_file_fails_with_file_not_found() {
    let dir = tempdir().unwrap();
    let err = PageFile::open(dir.path().join("absent.pf")).unwrap_err();
    assert!(matches!(err, DbError::FileNotFound(_)));
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();
    let mut pf = PageFile::open(&path).unwrap();

    let mut page = [0u8; PAGE_SIZE];
    page[0..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    pf.write_block(0, &page).unwrap();

    let mut back = [0u8; PAGE_SIZE];
    pf.read_block(0, &mut back).unwrap();
    assert_eq!(back[0..4], [0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn read_past_end_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();
    let mut pf = PageFile::open(&path).unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    let err = pf.read_block(3, &mut buf).unwrap_err();
    assert!(matches!(
        err,
        DbError::ReadNonExistingPage { page: 3, total: 1 }
    ));
}

#[test]
fn write_past_end_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();
    let mut pf = PageFile::open(&path).unwrap();

    let page = [7u8; PAGE_SIZE];
    let err = pf.write_block(1, &page).unwrap_err();
    assert!(matches!(err, DbError::WriteFailed { page: 1, total: 1 }));
}

#[test]
fn append_returns_sequential_indices() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();
    let mut pf = PageFile::open(&path).unwrap();

    assert_eq!(pf.append_empty_block().unwrap(), 1);
    assert_eq!(pf.append_empty_block().unwrap(), 2);
    assert_eq!(pf.total_pages(), 3);

    // Appended pages read back zeroed.
    let mut buf = [1u8; PAGE_SIZE];
    pf.read_block(2, &mut buf).unwrap();
    assert_eq!(buf, [0u8; PAGE_SIZE]);
}

#[test]
fn ensure_capacity_grows_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();
    let mut pf = PageFile::open(&path).unwrap();

    pf.ensure_capacity(4).unwrap();
    assert_eq!(pf.total_pages(), 4);

    // Already large enough: no-op.
    pf.ensure_capacity(2).unwrap();
    assert_eq!(pf.total_pages(), 4);
}

#[test]
fn reopen_sees_persisted_pages() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();

    {
        let mut pf = PageFile::open(&path).unwrap();
        pf.ensure_capacity(2).unwrap();
        let mut page = [0u8; PAGE_SIZE];
        page[100] = 42;
        pf.write_block(1, &page).unwrap();
    }

    let mut pf = PageFile::open(&path).unwrap();
    assert_eq!(pf.total_pages(), 2);
    let mut buf = [0u8; PAGE_SIZE];
    pf.read_block(1, &mut buf).unwrap();
    assert_eq!(buf[100], 42);
}

#[test]
fn destroy_removes_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.pf");
    PageFile::create(&path).unwrap();

    PageFile::destroy(&path).unwrap();
    assert!(matches!(
        PageFile::open(&path).unwrap_err(),
        DbError::FileNotFound(_)
    ));
    assert!(matches!(
        PageFile::destroy(&path).unwrap_err(),
        DbError::FileNotFound(_)
    ));
}
