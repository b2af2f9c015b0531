mod constant_folder;

pub use constant_folder::{
    evaluate_binary, evaluate_cast, evaluate_unary, ConstantFolder, FoldStats,
};
