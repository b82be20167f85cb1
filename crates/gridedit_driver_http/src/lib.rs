mod source;

pub use source::HttpRecordSource;
