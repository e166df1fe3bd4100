pub mod dataset_csv;

pub use dataset_csv::{read_dataset_csv, read_train_test_csv, LabelEncoder};
