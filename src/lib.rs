/**********************************************
  > File Name		: lib.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sat 05 Jun 2021 10:12:33 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A record based paged file manager, the lowest storage layer of a
 * database.
 *
 * Two layers compose the crate.
 *
 * The page_management layer exposes named disk files as sequences of
 * fixed size pages. Pages are grouped under header pages which keep
 * a page count and one free space entry per data page, so a page
 * with room for a new record can be found without touching any data
 * page.
 *
 * The record_management layer places variable length records into
 * those pages with a slotted page layout, hands out a stable
 * (page, slot) identifier for every inserted record and reads
 * records back by identifier.
 */

pub mod errors;
pub mod utils;
pub mod page_management;
pub mod record_management;

mod macros;
