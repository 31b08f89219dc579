pub mod bds05;
