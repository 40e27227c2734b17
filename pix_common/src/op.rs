/// Implements the arithmetic traits for single-field newtypes.
#[macro_export]
macro_rules! op {
    (binary $impl_type:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $impl_type {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trait::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $impl_type:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $impl_type {
            fn $method(&mut self, rhs: Self) {
                std::ops::$trait::$method(&mut self.0, rhs.0)
            }
        }
    };
    (unary $impl_type:ty, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $impl_type {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(std::ops::$trait::$method(self.0))
            }
        }
    };
}
