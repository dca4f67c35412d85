#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok(_), got Err({:?})", err),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!(concat!("Expected Ok(_): ", $($arg)+, ": {:?}"), err),
        }
    };
}

#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(val) => val,
            None => panic!("Expected Some(_), got None"),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match $expr {
            Some(val) => val,
            None => panic!(concat!("Expected Some(_): ", $($arg)+)),
        }
    };
}
