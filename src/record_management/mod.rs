/**********************************************
  > File Name		: mod.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Thu 10 Jun 2021 09:05:19 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * The record management component stores variable length records in
 * the paged files of the page_management component.
 *
 * Records in a page are managed by a slot directory growing from the
 * page end while the records themselves grow from the page start.
 * Every record is addressed by its page number and its slot index,
 * which stay stable for the lifetime of the record.
 */

pub mod record;
pub mod record_manager;
