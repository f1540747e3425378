/**********************************************
  > File Name		: record.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Thu 10 Jun 2021 09:21:44 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Record identifiers, attribute descriptors and the walk over the
 * external record format.
 *
 * The external format is what crosses the API:
 *   null bitmap, one bit per attribute, MSB first within each byte
 *   the non-null values packed in descriptor order
 * Int and Real values take 4 bytes, a VarChar value is a 4 byte
 * length followed by that many raw bytes, no terminator.
 */

use crate::utils;

//a record is addressed by its page and its 1-based slot within the
//page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RID {
    pub page_num: u32,
    pub slot_num: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Real,
    VarChar,
}

//one attribute of a record descriptor. length is 4 for the fixed
//types and the declared upper bound for VarChar.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttrType,
    pub length: u32,
}

pub fn null_bitmap_size(attr_count: usize) -> usize {
    (attr_count + 7) / 8
}

//attribute index is null iff bit (index % 8), counted from the high
//bit of byte index / 8, is set.
pub fn is_null(null_bitmap: &[u8], index: usize) -> bool {
    null_bitmap[index / 8] & (0x80 >> (index % 8)) != 0
}

/*
 * Render an external record as "name: value\t..." with NULL for the
 * fields the bitmap marks null. Mainly used for debugging and
 * testing.
 */
pub fn format_record(descriptor: &[Attribute], data: &[u8]) -> String {
    let nullsize = null_bitmap_size(descriptor.len());
    let mut out = String::new();
    let mut offset = nullsize;
    for (index, attr) in descriptor.iter().enumerate() {
        out.push_str(&attr.name);
        out.push_str(": ");
        if is_null(data, index) {
            out.push_str("NULL\t");
            continue;
        }
        match attr.attr_type {
            AttrType::Int => {
                out.push_str(&utils::read_i32(data, offset).to_string());
                offset += 4;
            }
            AttrType::Real => {
                out.push_str(&utils::read_f32(data, offset).to_string());
                offset += 4;
            }
            AttrType::VarChar => {
                let length = utils::read_u32(data, offset) as usize;
                offset += 4;
                out.push_str(&String::from_utf8_lossy(&data[offset..offset + length]));
                offset += length;
            }
        }
        out.push('\t');
    }
    out
}
