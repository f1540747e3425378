/**********************************************
  > File Name		: macros.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sat 05 Jun 2021 11:02:48 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Map fallible std calls to the crate error while the cause still
 * lands in the log.
 */

#[macro_export]
macro_rules! ok_or_return {
    ($func: expr, $Error: ident::$err: ident) => {{
        match $func {
            Ok(v) => v,
            Err(e) => {
                log::error!("{:?}", e);
                return Err($Error::$err);
            }
        }
    }};
}

#[macro_export]
macro_rules! error_return {
    ($func: expr, $Error: ident::$err: ident) => {
        if let Err(e) = $func {
            log::error!("{:?}", e);
            return Err($Error::$err);
        }
    };
}
