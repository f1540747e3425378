/**********************************************
  > File Name		: record_manager.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Fri 11 Jun 2021 10:14:08 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * The record layer. Records handed in by the caller are transcoded
 * into an internal form that makes every attribute reachable without
 * walking its predecessors:
 *
 *   attr_count: 2 | null bitmap | one 2 byte start offset per
 *   non-null attribute | the values, packed
 *
 * Data page layout: records grow from offset 0, the slot directory
 * grows from the page end. The last 6 bytes are the page footer,
 * free_space_offset (first free byte from the page start), then
 * slot_count, then first_free_slot (1-based index of a reusable
 * tombstoned slot, or -1). Each slot entry is 4 bytes, record length
 * then record offset, where offset -1 marks a tombstoned slot.
 *
 * Inserts prefer the page of the previous insert, which is still in
 * the page buffer. Otherwise the header pages are scanned for a page
 * with enough recorded free space and as a last resort a fresh page
 * is appended. When the contiguous space above free_space_offset is
 * too small but the page total suffices, the live records are
 * compacted down to the low offsets first.
 */

use log::{debug, error};

use super::record::{self, AttrType, Attribute, RID};
use crate::errors::Error;
use crate::page_management::page_file::{FileHandle, PagedFileManager, PAGES_PER_HEADER, PAGE_SIZE};
use crate::utils;

//the last 6 bytes of a data page.
pub const PAGE_FOOTER_SIZE: usize = 6;
//a slot directory entry: record length and record offset, 2 bytes
//each.
pub const SLOT_SIZE: usize = 4;
//a record must fit in one page together with the footer and one
//slot.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - PAGE_FOOTER_SIZE - SLOT_SIZE;

const FREE_SPACE_OFFSET: usize = PAGE_SIZE - 2;
const SLOT_COUNT_OFFSET: usize = PAGE_SIZE - 4;
const FIRST_FREE_SLOT_OFFSET: usize = PAGE_SIZE - 6;

//page offset of the 1-based slot index.
fn slot_offset(slot_num: u16) -> usize {
    PAGE_SIZE - PAGE_FOOTER_SIZE - SLOT_SIZE * slot_num as usize
}

//offset of a data page's free space entry within its header page.
fn header_entry_offset(page_num: u32) -> usize {
    4 + 2 * (page_num as usize % PAGES_PER_HEADER)
}

//the page the last insert went to. Its image is in the page buffer,
//free_space mirrors its header entry.
#[derive(Debug, Copy, Clone)]
struct WorkingPage {
    page_num: u32,
    header_num: u32,
    free_space: i32,
}

/*
 * One RecordBasedFileManager per thread: the scratch buffers and the
 * working page cache are deliberately not shareable. The embedded
 * PagedFileManager does the file bookkeeping, the record manager
 * only adds the record semantics on top.
 */
pub struct RecordBasedFileManager {
    pfm: PagedFileManager,
    page_buffer: Box<[u8; PAGE_SIZE]>,
    header_buffer: Box<[u8; PAGE_SIZE]>,
    record_buffer: Box<[u8; MAX_RECORD_SIZE]>,
    working_page: Option<WorkingPage>,
}

impl RecordBasedFileManager {
    pub fn new() -> Self {
        RecordBasedFileManager {
            pfm: PagedFileManager::new(),
            page_buffer: Box::new([0; PAGE_SIZE]),
            header_buffer: Box::new([0; PAGE_SIZE]),
            record_buffer: Box::new([0; MAX_RECORD_SIZE]),
            working_page: None,
        }
    }

    pub fn create_file(&mut self, file_name: &str) -> Result<(), Error> {
        self.pfm.create_file(file_name)
    }

    pub fn destroy_file(&mut self, file_name: &str) -> Result<(), Error> {
        self.pfm.destroy_file(file_name)
    }

    pub fn open_file(&mut self, file_name: &str, handle: &mut FileHandle) -> Result<(), Error> {
        self.pfm.open_file(file_name, handle)
    }

    pub fn close_file(&mut self, handle: &mut FileHandle) -> Result<(), Error> {
        self.pfm.close_file(handle)
    }

    /*
     * Transcode the external record into the internal format in the
     * record buffer and return the internal size. The size is
     * computed before a single byte is written, an oversize record
     * leaves all state untouched.
     */
    fn transcode_record(&mut self, descriptor: &[Attribute], data: &[u8]) -> Result<usize, Error> {
        let attr_count = descriptor.len();
        let nullsize = record::null_bitmap_size(attr_count);

        let mut non_null = Vec::new();
        for index in 0..attr_count {
            if !record::is_null(data, index) {
                non_null.push(index);
            }
        }

        let base = 2 + nullsize + 2 * non_null.len();
        let mut values_length = 0usize;
        for &index in &non_null {
            values_length += match descriptor[index].attr_type {
                AttrType::VarChar => {
                    4 + utils::read_u32(data, nullsize + values_length) as usize
                }
                _ => 4,
            };
        }
        let record_size = base + values_length;
        if record_size > MAX_RECORD_SIZE {
            error!(
                "record of size {} exceeds the maximum of {}",
                record_size, MAX_RECORD_SIZE
            );
            return Err(Error::Oversize);
        }

        utils::write_u16(&mut self.record_buffer[..], 0, attr_count as u16);
        self.record_buffer[2..2 + nullsize].copy_from_slice(&data[..nullsize]);
        let mut offset = 2 + nullsize;
        let mut running = 0usize;
        for &index in &non_null {
            utils::write_i16(&mut self.record_buffer[..], offset, (base + running) as i16);
            offset += 2;
            running += match descriptor[index].attr_type {
                AttrType::VarChar => 4 + utils::read_u32(data, nullsize + running) as usize,
                _ => 4,
            };
        }
        self.record_buffer[base..base + values_length]
            .copy_from_slice(&data[nullsize..nullsize + values_length]);
        Ok(record_size)
    }

    /*
     * Insert a record given in the external format and return the
     * rid under which it was stored.
     */
    pub fn insert_record(
        &mut self,
        handle: &mut FileHandle,
        descriptor: &[Attribute],
        data: &[u8],
    ) -> Result<RID, Error> {
        let record_size = self.transcode_record(descriptor, data)?;
        let required = record_size + SLOT_SIZE;

        //fast path: the page of the previous insert still has room
        //and its image is still in the page buffer.
        if let Some(working) = self.working_page {
            if working.free_space >= required as i32 {
                debug!("inserting into the current working page {}", working.page_num);
                return self.store_record_in_current_page(handle, working, record_size);
            }
        }
        self.working_page = None;

        if let Some(page_num) = handle.find_page_with_enough_space(required)? {
            //an existing page has room, make it the working page.
            let header_num = page_num / PAGES_PER_HEADER as u32;
            handle.read_header_page(header_num, &mut self.header_buffer)?;
            let free_space =
                utils::read_i16(&self.header_buffer[..], header_entry_offset(page_num)) as i32;
            handle.read_page(page_num, &mut self.page_buffer)?;
            debug!("inserting into page {} found by the header scan", page_num);
            let working = WorkingPage {
                page_num,
                header_num,
                free_space,
            };
            return self.store_record_in_current_page(handle, working, record_size);
        }

        //no page can take the record: append a fresh one, preceded
        //by a fresh header page when the last group is full.
        let total_pages = handle.get_number_of_pages()?;
        let header_num = total_pages / PAGES_PER_HEADER as u32;
        let page_num = total_pages;
        let free_space = (PAGE_SIZE - record_size - PAGE_FOOTER_SIZE - SLOT_SIZE) as i32;
        debug!("appending data page {} under header {}", page_num, header_num);

        if total_pages > 0 && total_pages as usize % PAGES_PER_HEADER == 0 {
            //the append below lands right behind this new header
            //page.
            debug!("group {} is full, writing header page {}", header_num - 1, header_num);
            self.header_buffer.fill(0);
            handle.write_header_page(header_num, &self.header_buffer)?;
        }

        //format the page with this single record.
        self.page_buffer.fill(0);
        self.page_buffer[..record_size].copy_from_slice(&self.record_buffer[..record_size]);
        utils::write_i16(&mut self.page_buffer[..], FIRST_FREE_SLOT_OFFSET, -1);
        utils::write_u16(&mut self.page_buffer[..], SLOT_COUNT_OFFSET, 1);
        utils::write_u16(&mut self.page_buffer[..], FREE_SPACE_OFFSET, record_size as u16);
        utils::write_u16(&mut self.page_buffer[..], slot_offset(1), record_size as u16);
        utils::write_i16(&mut self.page_buffer[..], slot_offset(1) + 2, 0);
        handle.append_page(&self.page_buffer)?;

        //patch the owning header: its local page count and the new
        //page's free space entry.
        handle.read_header_page(header_num, &mut self.header_buffer)?;
        let pages_in_group = total_pages + 1 - header_num * PAGES_PER_HEADER as u32;
        utils::write_u32(&mut self.header_buffer[..], 0, pages_in_group);
        utils::write_i16(
            &mut self.header_buffer[..],
            header_entry_offset(page_num),
            free_space as i16,
        );
        handle.write_header_page(header_num, &self.header_buffer)?;

        self.working_page = Some(WorkingPage {
            page_num,
            header_num,
            free_space,
        });
        Ok(RID {
            page_num,
            slot_num: 1,
        })
    }

    /*
     * Store the transcoded record into the working page, whose image
     * sits in the page buffer. The page is known to have enough
     * total free space, when the contiguous tail is too small the
     * live records are compacted first. The page goes to disk before
     * its header entry is patched.
     */
    fn store_record_in_current_page(
        &mut self,
        handle: &mut FileHandle,
        working: WorkingPage,
        record_size: usize,
    ) -> Result<RID, Error> {
        //re-validated once everything below succeeded.
        self.working_page = None;

        let free_space_offset = utils::read_u16(&self.page_buffer[..], FREE_SPACE_OFFSET) as usize;
        let mut slot_count = utils::read_u16(&self.page_buffer[..], SLOT_COUNT_OFFSET);
        let first_free_slot = utils::read_i16(&self.page_buffer[..], FIRST_FREE_SLOT_OFFSET);
        let no_free_slot = first_free_slot == -1;

        let mut contiguous = PAGE_SIZE as i32
            - free_space_offset as i32
            - PAGE_FOOTER_SIZE as i32
            - SLOT_SIZE as i32 * slot_count as i32;
        if no_free_slot {
            //a new slot entry comes out of the same free space.
            contiguous -= SLOT_SIZE as i32;
        }

        let chosen = if contiguous >= record_size as i32 {
            free_space_offset
        } else {
            debug!(
                "compacting page {}, {} contiguous bytes, {} needed",
                working.page_num, contiguous, record_size
            );
            self.compact_page(slot_count)
        };
        self.page_buffer[chosen..chosen + record_size]
            .copy_from_slice(&self.record_buffer[..record_size]);

        let slot_num = if no_free_slot {
            slot_count += 1;
            utils::write_u16(&mut self.page_buffer[..], SLOT_COUNT_OFFSET, slot_count);
            slot_count
        } else {
            first_free_slot as u16
        };
        utils::write_u16(&mut self.page_buffer[..], slot_offset(slot_num), record_size as u16);
        utils::write_i16(&mut self.page_buffer[..], slot_offset(slot_num) + 2, chosen as i16);

        if !no_free_slot {
            //the reused slot may not have been the only free one.
            let mut next_free = -1i16;
            for index in 1..=slot_count {
                if utils::read_i16(&self.page_buffer[..], slot_offset(index) + 2) == -1 {
                    next_free = index as i16;
                    break;
                }
            }
            utils::write_i16(&mut self.page_buffer[..], FIRST_FREE_SLOT_OFFSET, next_free);
        }

        utils::write_u16(
            &mut self.page_buffer[..],
            FREE_SPACE_OFFSET,
            (chosen + record_size) as u16,
        );

        handle.write_page(working.page_num, &self.page_buffer)?;

        //patch the free space entry in the owning header page.
        let free_space = working.free_space
            - record_size as i32
            - if no_free_slot { SLOT_SIZE as i32 } else { 0 };
        handle.read_header_page(working.header_num, &mut self.header_buffer)?;
        utils::write_i16(
            &mut self.header_buffer[..],
            header_entry_offset(working.page_num),
            free_space as i16,
        );
        handle.write_header_page(working.header_num, &self.header_buffer)?;

        self.working_page = Some(WorkingPage {
            free_space,
            ..working
        });
        Ok(RID {
            page_num: working.page_num,
            slot_num,
        })
    }

    /*
     * Slide every live record down to the low offsets, in offset
     * order, rewriting the slot offsets in place. Slot indices never
     * change. Returns the first free byte behind the compacted
     * records.
     */
    fn compact_page(&mut self, slot_count: u16) -> usize {
        //(slot, length, offset) of every live record.
        let mut live: Vec<(u16, usize, usize)> = Vec::new();
        for slot_num in 1..=slot_count {
            let length = utils::read_u16(&self.page_buffer[..], slot_offset(slot_num));
            let record_offset = utils::read_i16(&self.page_buffer[..], slot_offset(slot_num) + 2);
            if record_offset == -1 {
                continue;
            }
            live.push((slot_num, length as usize, record_offset as usize));
        }
        live.sort_by_key(|&(_, _, offset)| offset);

        let mut offset = 0usize;
        for (slot_num, length, record_offset) in live {
            if offset < record_offset {
                //source and destination may overlap.
                self.page_buffer
                    .copy_within(record_offset..record_offset + length, offset);
                utils::write_i16(
                    &mut self.page_buffer[..],
                    slot_offset(slot_num) + 2,
                    offset as i16,
                );
            }
            offset += length;
        }
        offset
    }

    /*
     * Read the record identified by rid and hand it back in the
     * external format.
     */
    pub fn read_record(
        &mut self,
        handle: &mut FileHandle,
        descriptor: &[Attribute],
        rid: &RID,
    ) -> Result<Vec<u8>, Error> {
        let total_pages = handle.get_number_of_pages()?;
        if rid.page_num >= total_pages {
            error!("rid page {} points to a nonexistent page", rid.page_num);
            return Err(Error::OutOfRange);
        }

        //reading repoints the scratch page buffer, the working page
        //cache only survives when it is the same page.
        match self.working_page {
            Some(working) if working.page_num == rid.page_num => {}
            _ => self.working_page = None,
        }
        handle.read_page(rid.page_num, &mut self.page_buffer)?;

        let slot_count = utils::read_u16(&self.page_buffer[..], SLOT_COUNT_OFFSET);
        if rid.slot_num < 1 || rid.slot_num > slot_count {
            error!("rid slot {} points to a nonexistent slot", rid.slot_num);
            return Err(Error::OutOfRange);
        }
        let record_length = utils::read_u16(&self.page_buffer[..], slot_offset(rid.slot_num)) as usize;
        let record_offset = utils::read_i16(&self.page_buffer[..], slot_offset(rid.slot_num) + 2);
        if record_offset == -1 {
            error!(
                "rid slot {} of page {} is tombstoned",
                rid.slot_num, rid.page_num
            );
            return Err(Error::Tombstoned);
        }
        let record_offset = record_offset as usize;
        self.record_buffer[..record_length]
            .copy_from_slice(&self.page_buffer[record_offset..record_offset + record_length]);

        //decode internal -> external: the null bitmap plus the
        //packed values, the offset table is dropped.
        let attr_count = utils::read_u16(&self.record_buffer[..], 0) as usize;
        let nullsize = record::null_bitmap_size(attr_count);

        let mut non_null_count = 0usize;
        for index in 0..attr_count {
            if !record::is_null(&self.record_buffer[2..], index) {
                non_null_count += 1;
            }
        }
        let base = 2 + nullsize + 2 * non_null_count;

        let mut values_length = 0usize;
        for index in 0..attr_count {
            if record::is_null(&self.record_buffer[2..], index) {
                continue;
            }
            values_length += match descriptor[index].attr_type {
                AttrType::VarChar => {
                    4 + utils::read_u32(&self.record_buffer[..], base + values_length) as usize
                }
                _ => 4,
            };
        }

        let mut data = Vec::with_capacity(nullsize + values_length);
        data.extend_from_slice(&self.record_buffer[2..2 + nullsize]);
        data.extend_from_slice(&self.record_buffer[base..base + values_length]);
        Ok(data)
    }

    /*
     * Interpret an external record with its descriptor and print one
     * "name: value" pair per attribute, NULL for null fields.
     */
    pub fn print_record(&self, descriptor: &[Attribute], data: &[u8]) {
        println!("{}", record::format_record(descriptor, data));
    }
}
