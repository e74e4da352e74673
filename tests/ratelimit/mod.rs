mod test_utils;

mod concurrency;
mod denial;
mod proxy;
