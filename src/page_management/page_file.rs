/**********************************************
  > File Name		: page_file.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 07 Jun 2021 08:42:56 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Introduction:
 *
 * The page_file component provides facilities for higher level
 * components to perform file I/O in terms of pages.
 *
 * A paged file is a sequence of PAGE_SIZE pages grouped under header
 * pages: each group is one header page followed by up to
 * PAGES_PER_HEADER data pages. A header page keeps the data page
 * count of its group in the first 4 bytes and one signed 16 bit free
 * space entry per data page behind it. The count of group 0 doubles
 * as the file wide total and is the only count the rest of the crate
 * trusts, the counts of later groups are merely local.
 *
 * Data pages are numbered from 0 across the whole file, header pages
 * have their own numbering. Both are addressed with positioned I/O,
 * no page ever needs the file cursor.
 *
 * The PagedFileManager handles the creation, deletion, opening and
 * closing of paged files and tracks how many handles every known
 * file currently has open. A FileHandle is one open instance of a
 * file and all page I/O goes through it.
 */

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use log::{debug, error, info};

use crate::errors::Error;
use crate::{error_return, ok_or_return};

pub const PAGE_SIZE: usize = 4096;
//number of data pages one header page can index: 4 bytes of the
//header hold the page count, every data page costs one 2 byte free
//space entry.
pub const PAGES_PER_HEADER: usize = (PAGE_SIZE - 4) / 2;

//physical file offset of the 0-based data page page_num.
fn page_offset(page_num: u32) -> u64 {
    let h = PAGES_PER_HEADER as u64;
    let pn = page_num as u64;
    ((pn / h) * (h + 1) + (pn % h + 1)) * PAGE_SIZE as u64
}

//physical file offset of the header page of group header_num.
fn header_offset(header_num: u32) -> u64 {
    header_num as u64 * (PAGES_PER_HEADER as u64 + 1) * PAGE_SIZE as u64
}

pub struct PagedFileManager {
    //file name -> count of currently open handles.
    file_tracker: HashMap<String, u32>,
}

impl PagedFileManager {
    pub fn new() -> Self {
        PagedFileManager {
            file_tracker: HashMap::new(),
        }
    }

    /*
     * Create an empty paged file. The file must not exist yet. The
     * file starts with the header page of group 0: total data page
     * count zero and all free space entries zero.
     */
    pub fn create_file(&mut self, file_name: &str) -> Result<(), Error> {
        if Path::new(file_name).exists() {
            error!("create_file: {} already exists", file_name);
            return Err(Error::AlreadyExists);
        }
        let fp = ok_or_return!(File::create(file_name), Error::IOError);
        let header = [0u8; PAGE_SIZE];
        error_return!(fp.write_all_at(&header, 0), Error::IOError);
        self.file_tracker.insert(file_name.to_string(), 0);
        Ok(())
    }

    /*
     * Remove a paged file. Only tracked files with no open handles
     * may be destroyed.
     */
    pub fn destroy_file(&mut self, file_name: &str) -> Result<(), Error> {
        match self.file_tracker.get(file_name) {
            None => {
                error!("destroy_file: {} is not tracked", file_name);
                Err(Error::NotFound)
            }
            Some(&count) if count > 0 => {
                error!(
                    "destroy_file: {} still has {} open handle(s)",
                    file_name, count
                );
                Err(Error::Busy)
            }
            Some(_) => {
                error_return!(std::fs::remove_file(file_name), Error::IOError);
                self.file_tracker.remove(file_name);
                Ok(())
            }
        }
    }

    /*
     * Bind an unbound handle to an existing paged file and count it.
     * Opening the same file through several handles is allowed,
     * though only one of them may mutate the file. Files created
     * outside this manager get tracked on first open.
     */
    pub fn open_file(&mut self, file_name: &str, handle: &mut FileHandle) -> Result<(), Error> {
        if !Path::new(file_name).exists() {
            error!("open_file: {} does not exist", file_name);
            return Err(Error::NotFound);
        }
        if handle.has_open_file() {
            error!(
                "open_file: the handle is already bound to {}",
                handle.file_name()
            );
            return Err(Error::Busy);
        }
        handle.open(file_name)?;
        *self.file_tracker.entry(file_name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /*
     * Close the open file instance referred to by the handle and
     * release its slot in the tracker.
     */
    pub fn close_file(&mut self, handle: &mut FileHandle) -> Result<(), Error> {
        if !handle.has_open_file() {
            error!("close_file: the handle has no open file");
            return Err(Error::NoOpenFile);
        }
        let file_name = handle.file_name().to_string();
        handle.close();
        if let Some(count) = self.file_tracker.get_mut(&file_name) {
            *count -= 1;
        }
        Ok(())
    }

    //dump the tracker to the log.
    pub fn print_file_tracker(&self) {
        for (file_name, count) in &self.file_tracker {
            info!("file_tracker[{}] -> handles={}", file_name, count);
        }
    }
}

/*
 * One open instance of a paged file. The handle owns the descriptor,
 * caches the total data page count and counts every successful page
 * read, write and append.
 *
 * The cached page count is refreshed from the first 4 bytes of the
 * file before every range check, another handle may have appended
 * pages in the meantime. Dropping the handle closes the descriptor.
 */
pub struct FileHandle {
    file: Option<File>,
    file_name: String,
    page_count: u32,
    read_page_counter: u32,
    write_page_counter: u32,
    append_page_counter: u32,
}

impl FileHandle {
    pub fn new() -> Self {
        FileHandle {
            file: None,
            file_name: String::new(),
            page_count: 0,
            read_page_counter: 0,
            write_page_counter: 0,
            append_page_counter: 0,
        }
    }

    pub fn has_open_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn open(&mut self, file_name: &str) -> Result<(), Error> {
        let fp = ok_or_return!(
            OpenOptions::new().read(true).write(true).open(file_name),
            Error::IOError
        );
        self.file = Some(fp);
        self.file_name = file_name.to_string();
        Ok(())
    }

    fn close(&mut self) {
        //dropping the descriptor closes it.
        self.file = None;
    }

    fn file(&self) -> Result<&File, Error> {
        match &self.file {
            Some(fp) => Ok(fp),
            None => {
                error!("no open file on this handle");
                Err(Error::NoOpenFile)
            }
        }
    }

    //the first 4 bytes of the file hold the total data page count.
    fn refresh_page_count(&mut self) -> Result<(), Error> {
        let mut bytes = [0u8; 4];
        error_return!(self.file()?.read_exact_at(&mut bytes, 0), Error::IOError);
        self.page_count = u32::from_le_bytes(bytes);
        Ok(())
    }

    pub fn get_number_of_pages(&mut self) -> Result<u32, Error> {
        self.refresh_page_count()?;
        Ok(self.page_count)
    }

    /*
     * Read the data page page_num into data. The page must exist,
     * page numbers start from 0.
     */
    pub fn read_page(&mut self, page_num: u32, data: &mut [u8; PAGE_SIZE]) -> Result<(), Error> {
        self.refresh_page_count()?;
        if page_num >= self.page_count {
            error!(
                "read_page: page {} is beyond the current range ({})",
                page_num, self.page_count
            );
            return Err(Error::OutOfRange);
        }
        error_return!(
            self.file()?.read_exact_at(data, page_offset(page_num)),
            Error::IOError
        );
        self.read_page_counter += 1;
        Ok(())
    }

    /*
     * Write data into the data page page_num. The page must exist.
     */
    pub fn write_page(&mut self, page_num: u32, data: &[u8; PAGE_SIZE]) -> Result<(), Error> {
        let page_count = self.get_number_of_pages()?;
        if page_num >= page_count {
            error!(
                "write_page: page {} is beyond the current range ({})",
                page_num, page_count
            );
            return Err(Error::OutOfRange);
        }
        error_return!(
            self.file()?.write_all_at(data, page_offset(page_num)),
            Error::IOError
        );
        self.write_page_counter += 1;
        Ok(())
    }

    /*
     * Append a new data page holding data at the end of the file and
     * bump the total page count in the header of group 0. The new
     * page's number equals the old page count.
     */
    pub fn append_page(&mut self, data: &[u8; PAGE_SIZE]) -> Result<(), Error> {
        let fp = self.file()?;
        let end = ok_or_return!(fp.metadata(), Error::IOError).len();
        error_return!(fp.write_all_at(data, end), Error::IOError);

        let page_count = self.get_number_of_pages()? + 1;
        error_return!(
            self.file()?.write_all_at(&page_count.to_le_bytes(), 0),
            Error::IOError
        );
        self.page_count = page_count;
        self.append_page_counter += 1;
        Ok(())
    }

    /*
     * Raw I/O on header pages. Neither touches the cached page count
     * nor the counters.
     */
    pub fn read_header_page(
        &self,
        header_num: u32,
        data: &mut [u8; PAGE_SIZE],
    ) -> Result<(), Error> {
        error_return!(
            self.file()?.read_exact_at(data, header_offset(header_num)),
            Error::IOError
        );
        Ok(())
    }

    pub fn write_header_page(&self, header_num: u32, data: &[u8; PAGE_SIZE]) -> Result<(), Error> {
        error_return!(
            self.file()?.write_all_at(data, header_offset(header_num)),
            Error::IOError
        );
        Ok(())
    }

    /*
     * Walk the header pages in order and return the first data page
     * whose recorded free space is at least required_space bytes.
     * The walk stops once it has seen every data page of the file,
     * so entries of pages that do not exist yet are never consulted.
     */
    pub fn find_page_with_enough_space(
        &mut self,
        required_space: usize,
    ) -> Result<Option<u32>, Error> {
        let total_pages = self.get_number_of_pages()?;
        let h = PAGES_PER_HEADER as u32;
        let total_headers = (total_pages + h - 1) / h;

        let mut page_num = 0u32;
        for header_num in 0..total_headers {
            for entry in 0..h {
                if page_num >= total_pages {
                    return Ok(None);
                }
                let entry_offset = header_offset(header_num) + 4 + 2 * entry as u64;
                let mut bytes = [0u8; 2];
                error_return!(
                    self.file()?.read_exact_at(&mut bytes, entry_offset),
                    Error::IOError
                );
                let free_space = i16::from_le_bytes(bytes);
                if free_space as i64 >= required_space as i64 {
                    debug!(
                        "page {} has {} free bytes, {} required",
                        page_num, free_space, required_space
                    );
                    return Ok(Some(page_num));
                }
                page_num += 1;
            }
        }
        Ok(None)
    }

    //current (reads, writes, appends) counter values.
    pub fn collect_counter_values(&self) -> (u32, u32, u32) {
        (
            self.read_page_counter,
            self.write_page_counter,
            self.append_page_counter,
        )
    }
}
