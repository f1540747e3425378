/**********************************************
  > File Name		: mod.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sat 05 Jun 2021 10:41:02 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Errors enum for global usage.
 * Every public interface of the crate returns Result with the Error
 * enum below, one variant per failure kind of the page layer and the
 * record layer. The underlying io::Error gets logged right where it
 * happens, the caller only sees the kind.
 */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists, //create_file on an existing path.
    NotFound, //open_file on a missing path, destroy_file on an untracked name.
    Busy, //destroy_file while handles are open, open_file on an already bound handle.
    NoOpenFile, //page operation or close_file on a handle without an open file.
    OutOfRange, //page number beyond the current page count, or a rid pointing to a nonexistent page or slot.
    Tombstoned, //read_record on a freed slot.
    Oversize, //record larger than MAX_RECORD_SIZE.
    IOError, //underlying filesystem failure.
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            Error::AlreadyExists => "file already exists",
            Error::NotFound => "file not found",
            Error::Busy => "file or handle is busy",
            Error::NoOpenFile => "no open file on this handle",
            Error::OutOfRange => "page or slot out of range",
            Error::Tombstoned => "slot is tombstoned",
            Error::Oversize => "record exceeds the maximum record size",
            Error::IOError => "file system error",
        };
        write!(f, "{}", desc)
    }
}

impl std::error::Error for Error {}
