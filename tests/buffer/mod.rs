mod buffer_pool_manager_tests;
